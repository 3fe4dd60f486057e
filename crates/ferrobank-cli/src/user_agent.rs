use std::future::Future;
use std::pin::Pin;

use ferrobank_core::{AuthorizationHandle, UserAgent};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Prints the authorization URL and reads the redirect URL from stdin. An
/// empty line or end of input cancels the flow.
#[derive(Debug, Default)]
pub struct ConsoleUserAgent;

impl UserAgent for ConsoleUserAgent {
    fn launch<'a>(
        &'a self,
        authorization_url: &'a str,
        handle: AuthorizationHandle,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            eprintln!("Open this URL in a browser and approve access:\n\n  {authorization_url}\n");
            eprintln!("Paste the URL you were redirected to (empty line cancels):");

            let mut line = String::new();
            let mut stdin = BufReader::new(tokio::io::stdin());
            match stdin.read_line(&mut line).await {
                Ok(_) if !line.trim().is_empty() => {
                    handle.complete(line.trim());
                }
                Ok(_) => {
                    handle.cancel();
                }
                Err(error) => {
                    tracing::warn!(error = %error, "could not read redirect URL");
                    handle.cancel();
                }
            }
        })
    }
}
