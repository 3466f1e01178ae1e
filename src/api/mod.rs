pub mod blofin;

pub use blofin::{BlofinClient, BlofinError, Credentials, OrderRequest, OrderResult};
