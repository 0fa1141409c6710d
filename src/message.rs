/// Everything collected about the message to be sent
///
/// The body only ever grows and the message can be handed to a sender at most
/// once, see [`MessageRecord::send_once`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    pub to: String,
    pub subject: Option<String>,
    /// Comma separated list of addresses
    pub cc: Option<String>,
    /// Comma separated list of addresses
    pub bcc: Option<String>,
    body: String,
    sent: bool,
}

impl MessageRecord {
    pub fn new(to: String) -> Self {
        debug_assert!(!to.is_empty());
        Self {
            to,
            subject: None,
            cc: None,
            bcc: None,
            body: String::new(),
            sent: false,
        }
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn append_body(&mut self, chunk: &str) {
        debug_assert!(!self.sent, "body changed after message was sent");
        self.body.push_str(chunk);
    }

    pub fn is_sent(&self) -> bool {
        self.sent
    }

    /// Calls `send` unless it has been called before for this message
    ///
    /// The flag is set before `send` runs. Returns true if `send` was called.
    pub fn send_once<F>(&mut self, send: F) -> bool
    where
        F: FnOnce(&MessageRecord),
    {
        if self.sent {
            return false;
        }
        self.sent = true;
        send(self);
        true
    }

    /// Body with each line feed replaced by an html line break, nothing else is changed
    pub fn html_body(&self) -> String {
        self.body.replace('\n', "<br>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn second_send_is_noop() {
        // Arrange
        let mut message = MessageRecord::new("ops@example.com".to_string());
        let mut calls = 0;

        // Act
        let first = message.send_once(|_| calls += 1);
        let second = message.send_once(|_| calls += 1);

        // Assert
        assert!(first);
        assert!(!second);
        assert_eq!(calls, 1);
        assert!(message.is_sent());
    }

    #[test]
    fn flag_set_before_send_runs() {
        let mut message = MessageRecord::new("ops@example.com".to_string());
        message.send_once(|m| assert!(m.is_sent()));
    }

    #[test]
    fn body_accumulates() {
        let mut message = MessageRecord::new("ops@example.com".to_string());
        message.append_body("hello\n");
        message.append_body("world\n");
        assert_eq!(message.body(), "hello\nworld\n");
    }

    #[rstest]
    #[case("", "")]
    #[case("hello\nworld\n", "hello<br>world<br>")]
    #[case("a\r\nb", "a\r<br>b")]
    #[case("<b>bold</b> & \"quotes\"\n\n", "<b>bold</b> & \"quotes\"<br><br>")]
    #[case("no newline", "no newline")]
    fn html_body(#[case] body: &str, #[case] expected: &str) {
        // Arrange
        let mut message = MessageRecord::new("ops@example.com".to_string());
        message.append_body(body);

        // Act
        let actual = message.html_body();

        // Assert
        assert_eq!(actual, expected);
        assert_eq!(actual.replace("<br>", "\n"), body);
    }
}
