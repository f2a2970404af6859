pub mod banner;
pub mod bus;
pub mod consts;
pub mod handler;
pub mod lookup;
pub mod service;
pub mod stdio;
