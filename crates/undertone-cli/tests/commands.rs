//! End-to-end runs of the compiled binary.

use std::process::Command;

fn noise_jpeg(width: u16, height: u16, quality: u8, seed: u64) -> Vec<u8> {
    let mut rng = fastrand::Rng::with_seed(seed);
    let rgba: Vec<u8> =
        (0..usize::from(width) * usize::from(height) * 4).map(|_| rng.u8(..)).collect();
    undertone_core::encode_rgba(&rgba, width, height, quality, &[], None).unwrap()
}

fn undertone() -> Command {
    Command::new(env!("CARGO_BIN_EXE_undertone"))
}

#[test]
fn hide_then_unveil_through_files() {
    let dir = tempfile::tempdir().unwrap();
    let cover = dir.path().join("cover.jpg");
    let stego = dir.path().join("stego.jpg");
    std::fs::write(&cover, noise_jpeg(128, 128, 90, 404)).unwrap();

    let message = "dead drop at the old oak";
    let hide = undertone()
        .args(["hide", "-i"])
        .arg(&cover)
        .arg("-o")
        .arg(&stego)
        .args(["-m", message])
        .output()
        .unwrap();
    assert!(hide.status.success(), "hide failed: {}", String::from_utf8_lossy(&hide.stderr));

    let unveil = undertone()
        .args(["unveil", "-i"])
        .arg(&stego)
        .args(["--length", &message.len().to_string()])
        .output()
        .unwrap();
    assert!(unveil.status.success());
    assert_eq!(String::from_utf8_lossy(&unveil.stdout).trim_end(), message);
}

#[test]
fn inspect_reports_geometry() {
    let dir = tempfile::tempdir().unwrap();
    let cover = dir.path().join("cover.jpg");
    std::fs::write(&cover, noise_jpeg(64, 48, 85, 7)).unwrap();

    let inspect = undertone().args(["inspect", "-i"]).arg(&cover).output().unwrap();
    assert!(inspect.status.success());
    let stdout = String::from_utf8_lossy(&inspect.stdout);
    assert!(stdout.contains("64x48"), "missing geometry in: {stdout}");
    assert!(stdout.contains("capacity"));
}

#[test]
fn unrecognized_input_exits_with_2() {
    let dir = tempfile::tempdir().unwrap();
    let not_jpeg = dir.path().join("not.jpg");
    std::fs::write(&not_jpeg, b"definitely not a jpeg").unwrap();

    let out = undertone()
        .args(["inspect", "-i"])
        .arg(&not_jpeg)
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(2));
}

#[test]
fn capacity_exhaustion_exits_with_3() {
    let dir = tempfile::tempdir().unwrap();
    let cover = dir.path().join("tiny.jpg");
    let stego = dir.path().join("stego.jpg");
    std::fs::write(&cover, noise_jpeg(16, 16, 40, 9)).unwrap();

    let long: String = std::iter::repeat('x').take(4000).collect();
    let out = undertone()
        .args(["hide", "-i"])
        .arg(&cover)
        .arg("-o")
        .arg(&stego)
        .args(["-m", &long])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(3));
}

#[test]
fn extraction_failure_exits_with_4() {
    let dir = tempfile::tempdir().unwrap();
    let cover = dir.path().join("tiny.jpg");
    std::fs::write(&cover, noise_jpeg(16, 16, 40, 10)).unwrap();

    // Far more bytes than the carrier can hold
    let out = undertone()
        .args(["unveil", "-i"])
        .arg(&cover)
        .args(["--length", "100000"])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(4));
}
