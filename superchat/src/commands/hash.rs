//! `superchat hash-password` — hashes a password the same way
//! `create-user`/the wire protocol's registration path does, for operators
//! who want to write a `password_hash` into the database by hand.

use anyhow::Result;
use std::io::{stdin, IsTerminal};
use superchat_common::helpers::hash::hash_password;

pub fn command() -> Result<()> {
    let input = if stdin().is_terminal() {
        dialoguer::Password::new()
            .with_prompt("Password to be hashed")
            .interact()?
    } else {
        let mut line = String::new();
        stdin().read_line(&mut line)?;
        line.trim_end_matches(['\r', '\n']).to_string()
    };

    println!("{}", hash_password(&input));
    Ok(())
}
