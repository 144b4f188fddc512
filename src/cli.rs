//! Interactive terminal chat over an initialized [`Assistant`].
//!
//! Each input line is a question. `/new` starts a fresh conversation and
//! `/quit` (or end of input) leaves.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::warn;

use crate::application::Assistant;

const PROMPT: &[u8] = b"> ";
const FRAGMENT_BUFFER: usize = 64;

#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Empty,
    Quit,
    NewChat,
    Ask(&'a str),
}

impl<'a> Command<'a> {
    fn parse(line: &'a str) -> Self {
        match line.trim() {
            "" => Self::Empty,
            "/quit" | "/exit" => Self::Quit,
            "/new" => Self::NewChat,
            question => Self::Ask(question),
        }
    }
}

pub async fn run<R, W>(assistant: &mut Assistant, input: R, output: &mut W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    output
        .write_all(b"Workspace Assistant. Ask a question, /new to start over, /quit to leave.\n")
        .await?;

    let mut lines = input.lines();
    loop {
        output.write_all(PROMPT).await?;
        output.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match Command::parse(&line) {
            Command::Empty => continue,
            Command::Quit => break,
            Command::NewChat => match assistant.new_chat() {
                Ok(()) => output.write_all(b"Started a new conversation.\n").await?,
                Err(e) => output.write_all(format!("Error: {e}\n").as_bytes()).await?,
            },
            Command::Ask(question) => ask(assistant, question, output).await?,
        }
    }

    output.write_all(b"\n").await?;
    output.flush().await
}

/// Prints fragments as they arrive.
async fn ask<W>(assistant: &mut Assistant, question: &str, output: &mut W) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let (tx, mut rx) = mpsc::channel::<String>(FRAGMENT_BUFFER);

    let printer = async {
        while let Some(fragment) = rx.recv().await {
            output.write_all(fragment.as_bytes()).await?;
            output.flush().await?;
        }
        Ok::<_, std::io::Error>(())
    };
    let (answer, printed) = tokio::join!(assistant.chat_streaming(question, tx), printer);
    printed?;

    match answer {
        Ok(_) => output.write_all(b"\n").await,
        Err(e) => {
            warn!(error = %e, "question failed");
            output.write_all(format!("Error: {e}\n").as_bytes()).await
        }
    }
}
