mod info;
mod opcode;
mod request;
mod response;

pub use info::{ChannelInfo, MessageInfo, SshKeyInfo};
pub use opcode::{request as request_type, response as response_type};
pub use request::*;
pub use response::*;
