use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};

///
/// Write every line into the output file
///
/// * `lines` - vector of lines
/// * `output_file_path` - output file name
///
pub fn write_lines(lines: &[Box<str>], output_file_path: &str) -> anyhow::Result<()> {
    let mut buf = BufWriter::new(File::create(output_file_path)?);
    for line in lines {
        if let Err(e) = writeln!(buf, "{}", line) {
            if e.kind() == std::io::ErrorKind::BrokenPipe {
                return Ok(());
            } else {
                return Err(anyhow::anyhow!("unexpected error: {}", e));
            }
        }
    }
    buf.flush()?;
    Ok(())
}

///
/// Read every line of the input file
///
/// * `input_file_path` - input file name
///
pub fn read_lines(input_file_path: &str) -> anyhow::Result<Vec<Box<str>>> {
    let buf = BufReader::new(File::open(input_file_path)?);
    let mut lines = vec![];
    for line in buf.lines() {
        lines.push(line?.into_boxed_str());
    }
    Ok(lines)
}

/// Take the extension of `file_path` or fail
pub fn file_ext(file_path: &str) -> anyhow::Result<Box<str>> {
    std::path::Path::new(file_path)
        .extension()
        .and_then(|x| x.to_str())
        .map(|x| x.to_string().into_boxed_str())
        .ok_or(anyhow::anyhow!("no file extension in {}", file_path))
}

/// Create the parent directory of `file_path` when it is missing
pub fn mkdir_for(file_path: &str) -> anyhow::Result<()> {
    if let Some(parent) = std::path::Path::new(file_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
