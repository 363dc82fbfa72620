use log::{debug, warn};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    spawn,
    sync::mpsc::{self, Receiver},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Quit,
    Restart,
}

impl Command {
    pub fn from_key(key: char) -> Option<Command> {
        match key {
            'q' => Some(Command::Quit),
            ' ' => Some(Command::Restart),
            _ => None,
        }
    }

    /// Input is line buffered, so a bare enter counts as a restart too.
    pub fn from_line(line: &str) -> Option<Command> {
        match line.chars().next() {
            None => Some(Command::Restart),
            Some(key) => Command::from_key(key),
        }
    }
}

/// Read commands from `input` in the background. The channel closes when the
/// input ends.
pub fn spawn_reader<R>(input: R) -> Receiver<Command>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (sender, receiver) = mpsc::channel(8);

    spawn(async move {
        let mut lines = BufReader::new(input).lines();

        loop {
            match lines.next_line().await {
                Ok(Some(line)) => match Command::from_line(&line) {
                    Some(command) => {
                        if sender.send(command).await.is_err() {
                            break;
                        }
                    }
                    None => debug!("ignoring input {line:?}"),
                },
                Ok(None) => {
                    debug!("input closed");
                    break;
                }
                Err(e) => {
                    warn!("error reading input: {e}");
                    break;
                }
            }
        }
    });

    receiver
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys() {
        assert_eq!(Command::from_key('q'), Some(Command::Quit));
        assert_eq!(Command::from_key(' '), Some(Command::Restart));
        assert_eq!(Command::from_key('x'), None);
        assert_eq!(Command::from_line(""), Some(Command::Restart));
        assert_eq!(Command::from_line("quit"), Some(Command::Quit));
        assert_eq!(Command::from_line("abc"), None);
    }

    #[tokio::test]
    async fn reads_commands_until_eof() {
        let mut commands = spawn_reader(&b"\nfoo\n q\nq\n"[..]);

        assert_eq!(commands.recv().await, Some(Command::Restart));
        assert_eq!(commands.recv().await, Some(Command::Restart));
        assert_eq!(commands.recv().await, Some(Command::Quit));
        assert_eq!(commands.recv().await, None);
    }
}
