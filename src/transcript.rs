use chrono::Local;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Côté de la connexion d'où vient une ligne du transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Incoming,
    Outgoing,
}

impl Direction {
    fn marker(self) -> &'static str {
        match self {
            Direction::Incoming => "<<<",
            Direction::Outgoing => ">>>",
        }
    }
}

/// Convertit les caractères de contrôle et non ASCII en séquences d'échappement
pub fn safe_log_string(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '\0' => result.push_str("\\0"),
            '\t' => result.push('\t'),
            '\x01'..='\x1f' | '\x7f' => {
                result.push_str(&format!("\\x{:02x}", c as u32));
            }
            _ if c.is_ascii() => result.push(c),
            _ => {
                result.push_str(&format!("\\u{{{:x}}}", c as u32));
            }
        }
    }
    result
}

/// Journal brut des sessions : une ligne par ligne du protocole, horodatée
/// et préfixée par l'adresse du client
pub struct Transcript {
    writer: Option<Arc<Mutex<BufWriter<File>>>>,
    stdout: bool,
    raw_display: bool,
}

impl Transcript {
    pub fn new(log_file: Option<PathBuf>, stdout: bool, raw_display: bool) -> anyhow::Result<Self> {
        let writer = if let Some(path) = log_file {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    std::fs::create_dir_all(parent)?;
                }
            }

            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;

            Some(Arc::new(Mutex::new(BufWriter::new(file))))
        } else {
            None
        };

        Ok(Self { writer, stdout, raw_display })
    }

    pub fn disabled() -> Self {
        Self {
            writer: None,
            stdout: false,
            raw_display: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.stdout || self.writer.is_some()
    }

    /// Un texte sur plusieurs lignes (corps de message) reçoit le préfixe
    /// sur chaque ligne
    fn render(&self, peer: &str, direction: Direction, text: &str) -> String {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let mut out = String::new();
        for line in text.split("\r\n") {
            let line = if self.raw_display {
                line.to_string()
            } else {
                safe_log_string(line)
            };
            out.push_str(&format!("{} {} {} {}\n", timestamp, peer, direction.marker(), line));
        }
        out
    }

    pub async fn log(&self, peer: &str, direction: Direction, text: &str) {
        if !self.is_enabled() {
            return;
        }

        let rendered = self.render(peer, direction, text);

        if self.stdout {
            print!("{}", rendered);
        }

        if let Some(writer) = &self.writer {
            let mut writer = writer.lock().await;
            let _ = writer.write_all(rendered.as_bytes());
            let _ = writer.flush();
        }
    }
}
