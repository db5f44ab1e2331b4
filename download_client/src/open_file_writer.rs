use std::path::Path;
use tokio::{
    fs::{File, OpenOptions},
    io::{self, BufWriter},
};

/// Opens a fresh file for a retrieval. Refuses to clobber an existing one.
pub async fn open_file_writer(file: &Path, buf_size: usize) -> Result<BufWriter<File>, io::Error> {
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(file)
        .await?;

    Ok(BufWriter::with_capacity(buf_size, file))
}
