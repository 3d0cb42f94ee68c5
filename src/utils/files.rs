use std::path::Path;

use tokio::{
    fs::{self, File},
    io::{self, AsyncBufReadExt, Lines},
};

/// Read a file from the given path into a list of lines
pub async fn read_lines<P: AsRef<Path>>(path: P) -> io::Result<Vec<String>> {
    let mut reader = line_reader(path.as_ref()).await?;
    let mut lines = Vec::new();

    while let Some(line) = reader.next_line().await? {
        lines.push(line);
    }

    Ok(lines)
}

/// Create the artifact directory (and its parents) if it doesn't exist yet
pub async fn ensure_dir<P: AsRef<Path>>(path: P) -> io::Result<()> {
    fs::create_dir_all(path).await
}

async fn line_reader(path: &Path) -> io::Result<Lines<io::BufReader<File>>> {
    let f = File::open(path).await.map_err(|e| {
        io::Error::new(e.kind(), format!("unable to open {}: {}", path.display(), e))
    })?;

    Ok(io::BufReader::new(f).lines())
}
