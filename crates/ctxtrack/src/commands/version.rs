pub fn run() -> anyhow::Result<()> {
    println!("ctxtrack {}", env!("CARGO_PKG_VERSION"));
    println!("Correlates AI chat responses with workspace edits");
    Ok(())
}
