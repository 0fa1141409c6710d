use std::io::{BufRead, ErrorKind};

use log::{debug, error};

use crate::message::MessageRecord;

/// Token that ends the message when it is alone on a line
pub const TERMINATOR: &str = "EOT";

/// Why reading stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ending {
    Terminator,
    EndOfInput,
}

/// True if only `EOT` is left after dropping everything that is not an ascii letter
pub fn is_terminator(chunk: &str) -> bool {
    let mut letters = chunk.chars().filter(char::is_ascii_alphabetic);
    TERMINATOR.chars().all(|expected| letters.next() == Some(expected)) && letters.next().is_none()
}

/// Reads `input` line by line into the body of `message` and sends it once done
///
/// A terminator line is not added to the body and nothing after it is read.
/// `send` runs at most once per message, even if the message was already sent
/// before calling this.
pub fn pump<R, F>(mut input: R, message: &mut MessageRecord, send: F) -> Ending
where
    R: BufRead,
    F: FnOnce(&MessageRecord),
{
    let mut buf = Vec::new();
    let ending = loop {
        buf.clear();
        match input.read_until(b'\n', &mut buf) {
            Ok(0) => break Ending::EndOfInput,
            Ok(_) => {
                let chunk = String::from_utf8_lossy(&buf);
                if is_terminator(&chunk) {
                    debug!("Terminator received");
                    break Ending::Terminator;
                }
                message.append_body(&chunk);
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                error!("Failed to read from stdin, sending what was received so far: {e}");
                break Ending::EndOfInput;
            }
        }
    };
    debug!("Stopped reading input: {ending:?}");
    if !message.send_once(send) {
        debug!("Message already sent");
    }
    ending
}
