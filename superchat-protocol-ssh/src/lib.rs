//! SSH transport adapter: key-to-identity authentication over an ordinary
//! SSH connection. A client connects with an ordinary SSH client,
//! authenticates with a password (any
//! password — there is no SSH-level credential to check, the same anonymous
//! entry point as TCP/WS) or a public key, opens one session channel, and
//! from then on that channel carries exactly the same length-prefixed wire
//! frames `superchat-protocol-tcp` reads off a raw socket. A public key that
//! matches a row in `ssh_keys` (added earlier over the wire protocol via
//! `ADD_SSH_KEY`) pre-authenticates the session as that key's owner before a
//! single byte of the chat protocol has been exchanged.

mod keys;
mod server;

pub use server::run_server;
