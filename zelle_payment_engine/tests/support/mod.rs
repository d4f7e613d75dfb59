#![allow(dead_code)]

pub mod notifications;
pub mod prepare_env;
