pub mod addon;
pub mod catalog;
pub mod reseller;
pub mod slug;
