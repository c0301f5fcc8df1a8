//! 도메인 모델.

pub mod exchange;
pub mod market;
pub mod order;

pub use exchange::{translate, ApiFamily, Exchange, Venue};
pub use market::{AccountBalance, BuyingPower, OpenOrder, Position, Quote};
pub use order::{order_type, OrderAck, OrderRequest, Side};
