//! Telegram WebApp authentication

pub mod webapp_auth;

pub use webapp_auth::{
    sign_init_data, verify_init_data, verify_init_data_at, AuthFailure, Identity, Verifier,
};
