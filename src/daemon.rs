use std::path::Path;

#[cfg(unix)]
pub fn daemonize(pid_file: &Path) -> anyhow::Result<()> {
    use daemonize::Daemonize;

    eprintln!("[INFO] Starting daemon mode...");

    // Garde le répertoire courant pour les chemins relatifs de --data et --logs
    let daemonize = Daemonize::new()
        .pid_file(pid_file)
        .chown_pid_file(true)
        .working_directory(".")
        .umask(0o027);

    daemonize
        .start()
        .map_err(|e| anyhow::anyhow!("Failed to start daemon mode: {}", e))
}

#[cfg(not(unix))]
pub fn daemonize(_pid_file: &Path) -> anyhow::Result<()> {
    eprintln!("[INFO] Daemon mode not supported on this platform, staying in foreground");
    Ok(())
}
