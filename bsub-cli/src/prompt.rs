//! Interactive input

use anyhow::{Result, bail};
use std::io::{BufRead, Write};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// Print `message` and read one line from stdin
///
/// The read happens on its own thread so that a cancelled prompt never
/// holds up the runtime. Returns the line without its trailing newline.
pub async fn read_line(message: &str, cancel: &CancellationToken) -> Result<String> {
    print!("{}", message);
    std::io::stdout().flush()?;

    let (tx, rx) = oneshot::channel();
    std::thread::spawn(move || {
        let mut line = String::new();
        let result = std::io::stdin().lock().read_line(&mut line).map(|_| line);
        let _ = tx.send(result);
    });

    tokio::select! {
        biased;
        _ = cancel.cancelled() => bail!("cancelled"),
        line = rx => {
            let line = line??;
            Ok(line.trim_end_matches(['\r', '\n']).to_string())
        }
    }
}
