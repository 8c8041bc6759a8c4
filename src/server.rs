use crate::channel::Channel;
use crate::config::Opt;
use crate::sink::{EmlDirSink, LogSink, MessageSink, Tee};
use crate::transcript::Transcript;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info, warn};

pub struct SmtpServer {
    pub opt: Opt,
    channel: Channel,
}

/// Name announced to clients: `--hostname` when given, the local host
/// name otherwise. Looked up once per process.
pub fn resolve_fqdn(configured: Option<&str>) -> Result<String> {
    if let Some(name) = configured {
        return Ok(name.to_owned());
    }

    hostname::get()
        .context("Failed to read the local hostname")?
        .into_string()
        .map_err(|name| anyhow::anyhow!("Hostname is not valid UTF-8: {:?}", name))
}

fn build_sink(opt: &Opt) -> Result<Arc<dyn MessageSink>> {
    let Some(data_dir) = &opt.data_dir else {
        return Ok(Arc::new(LogSink));
    };

    // Créer le dossier data si nécessaire
    if !data_dir.exists() {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory: {:?}", data_dir))?;
        info!(path = ?data_dir, "data directory created");
    }

    Ok(Arc::new(Tee::new(vec![
        Box::new(EmlDirSink::new(data_dir)),
        Box::new(LogSink),
    ])))
}

impl SmtpServer {
    pub fn new(opt: Opt) -> Result<Self> {
        let fqdn = resolve_fqdn(opt.hostname.as_deref())?;
        let sink = build_sink(&opt)?;
        let transcript = Transcript::new(opt.log_file.clone(), opt.verbose, opt.raw_display)
            .with_context(|| format!("Failed to open transcript file: {:?}", opt.log_file))?;

        let channel = Channel::new(fqdn, sink)
            .with_transcript(Arc::new(transcript))
            .with_banner_delay(opt.banner_delay());

        Ok(Self { opt, channel })
    }

    /// Builds a server around a ready-made channel.
    pub fn with_channel(opt: Opt, channel: Channel) -> Self {
        Self { opt, channel }
    }

    pub fn fqdn(&self) -> &str {
        self.channel.fqdn()
    }

    pub async fn handle_client(&self, stream: TcpStream, client_addr: SocketAddr) {
        let peer = client_addr.to_string();
        info!(peer = %peer, "new connection");

        if let Err(e) = self.channel.handle_connection(stream, &peer).await {
            error!(peer = %peer, error = %e, "session ended with error");
        }
    }

    /// Accepts connections until the listener fails, one task per
    /// connection.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        let local = listener.local_addr()?;
        info!(address = %local, "listening");

        loop {
            match listener.accept().await {
                Ok((stream, client_addr)) => {
                    let this = Arc::clone(&self);
                    tokio::spawn(async move {
                        this.handle_client(stream, client_addr).await;
                    });
                }
                Err(e) => {
                    warn!(address = %local, error = %e, "accept failed");
                }
            }
        }
    }

    async fn run_server(self: Arc<Self>, port: u16) -> Result<()> {
        let addr = format!("{}:{}", self.opt.address, port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind to {}", addr))?;

        self.serve(listener).await
    }

    pub async fn run(self: Arc<Self>) -> Result<()> {
        let mut handles = vec![];

        for port in self.opt.ports.clone() {
            let this = Arc::clone(&self);
            let handle = tokio::spawn(async move {
                if let Err(e) = this.run_server(port).await {
                    error!(port, error = %e, "server failed");
                }
            });
            handles.push(handle);
        }

        for handle in handles {
            handle.await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use structopt::StructOpt;

    #[test]
    fn test_configured_hostname_wins() {
        assert_eq!(
            resolve_fqdn(Some("mx.example.com")).unwrap(),
            "mx.example.com"
        );
    }

    #[test]
    fn test_local_hostname_is_not_empty() {
        assert!(!resolve_fqdn(None).unwrap().is_empty());
    }

    #[test]
    fn test_new_creates_data_directory() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("spool");
        let opt = Opt::from_iter([
            "smtpd",
            "--hostname",
            "example.com",
            "--data",
            data.to_str().unwrap(),
        ]);

        let server = SmtpServer::new(opt).unwrap();
        assert_eq!(server.fqdn(), "example.com");
        assert!(data.is_dir());
    }
}
