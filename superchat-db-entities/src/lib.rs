#![allow(non_snake_case)]

pub mod Channel;
pub mod Message;
pub mod SshKey;
pub mod User;
