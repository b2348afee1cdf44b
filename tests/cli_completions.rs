use std::path::PathBuf;

#[test]
fn completions_leave_data_dir_untouched() -> Result<(), Box<dyn std::error::Error>>
{
    let tempdir = tempfile::tempdir()?;
    let data_dir = tempdir.path().join("jotter");

    let output = std::process::Command::new(jotter_bin()?)
        .args(["completions", "bash"])
        .env("JOTTER_DATA_DIR", &data_dir)
        .output()?;

    assert!(output.status.success());
    assert!(String::from_utf8(output.stdout)?.contains("jotter"));
    assert!(!data_dir.exists());
    Ok(())
}

fn jotter_bin() -> Result<PathBuf, Box<dyn std::error::Error>> {
    if let Ok(bin) = std::env::var("CARGO_BIN_EXE_jotter") {
        return Ok(PathBuf::from(bin));
    }

    let mut path = std::env::current_exe()?;
    path.pop();
    if path.ends_with("deps") {
        path.pop();
    }
    path.push("jotter");

    if cfg!(windows) {
        path.set_extension("exe");
    }

    Ok(path)
}
