pub mod auth;
pub mod classify;
pub mod dapp_action;
pub mod link;
pub mod request;
pub mod wallet;
