pub mod error;
pub mod model;
pub mod time;

pub use error::{CoreError, Result};
pub use model::{
    OrderIntent, SaleWindow, SeckillVoucher, Shop, ShopType, VoucherOrder, WindowStatus,
};
pub use time::{format_day, now_utc};
