use std::path::{Path, PathBuf};

use tokio::fs;

use super::error::ImageGenError;
use super::params::GeneratedImage;

const DEFAULT_BASE: &str = "generated";
const DEFAULT_EXT: &str = "png";

/// Compute `count` destination paths that do not exist on disk.
///
/// An explicit output with count == 1 is used verbatim, no suffixing and no
/// existence check. Otherwise the base name comes from the explicit output's
/// stem, else the stem of the last input image, else "generated"; the
/// extension comes from the explicit output, else "png". Names always carry a
/// numeric suffix so an earlier result is never silently overwritten.
pub fn resolve_output_paths(
    explicit: Option<&Path>,
    inputs: &[PathBuf],
    count: usize,
) -> Vec<PathBuf> {
    if let Some(path) = explicit {
        if count == 1 {
            return vec![path.to_path_buf()];
        }
    }

    let (dir, base, ext) = if let Some(path) = explicit {
        (parent_of(path), stem_of(path), ext_of(path))
    } else if let Some(last) = inputs.last() {
        (parent_of(last), stem_of(last), DEFAULT_EXT.to_string())
    } else {
        (
            PathBuf::new(),
            DEFAULT_BASE.to_string(),
            DEFAULT_EXT.to_string(),
        )
    };

    numbered_paths(&dir, &base, &ext, count)
}

/// Smallest-k sequential names. The search continues from k+1 after each hit,
/// so names handed out earlier in the same pass are taken even though nothing
/// has been written yet.
fn numbered_paths(dir: &Path, base: &str, ext: &str, count: usize) -> Vec<PathBuf> {
    let mut paths = Vec::with_capacity(count);
    let mut k: u32 = 1;
    while paths.len() < count {
        let candidate = dir.join(format!("{base}_{k}.{ext}"));
        k += 1;
        if !candidate.exists() {
            paths.push(candidate);
        }
    }
    paths
}

fn parent_of(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_default()
}

fn stem_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_BASE.to_string())
}

fn ext_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_EXT.to_string())
}

/// Write each image to its planned path, reporting every file as it lands.
/// A failed write is logged and does not stop the remaining writes or roll
/// back files already on disk; the first failure is returned at the end.
pub async fn write_images(
    plan: &[PathBuf],
    images: &[GeneratedImage],
) -> Result<Vec<PathBuf>, ImageGenError> {
    let mut written = Vec::with_capacity(plan.len());
    let mut first_failure = None;

    for (path, image) in plan.iter().zip(images) {
        match fs::write(path, &image.bytes).await {
            Ok(()) => {
                println!("  Output: {}", path.display());
                written.push(path.clone());
            }
            Err(source) => {
                tracing::error!("failed to write {}: {}", path.display(), source);
                if first_failure.is_none() {
                    first_failure = Some(ImageGenError::Write {
                        path: path.clone(),
                        source,
                    });
                }
            }
        }
    }

    match first_failure {
        Some(err) => Err(err),
        None => Ok(written),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        std::fs::write(path, b"x").unwrap();
    }

    fn png(bytes: &[u8]) -> GeneratedImage {
        GeneratedImage {
            bytes: bytes.to_vec(),
            mime_type: "image/png".to_string(),
        }
    }

    #[test]
    fn fresh_generation_uses_numbered_names() {
        let paths = resolve_output_paths(None, &[], 3);
        assert_eq!(
            paths,
            vec![
                PathBuf::from("generated_1.png"),
                PathBuf::from("generated_2.png"),
                PathBuf::from("generated_3.png"),
            ]
        );
    }

    #[test]
    fn single_result_still_gets_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("photo.jpg");
        touch(&input);

        let paths = resolve_output_paths(None, &[input], 1);
        assert_eq!(paths, vec![dir.path().join("photo_1.png")]);
    }

    #[test]
    fn base_name_comes_from_last_input() {
        let dir = tempfile::tempdir().unwrap();
        let style = dir.path().join("style.jpg");
        let photo = dir.path().join("photo.jpg");
        touch(&style);
        touch(&photo);

        let paths = resolve_output_paths(None, &[style, photo], 2);
        assert_eq!(
            paths,
            vec![
                dir.path().join("photo_1.png"),
                dir.path().join("photo_2.png"),
            ]
        );
    }

    #[test]
    fn existing_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("photo.jpg");
        touch(&input);
        touch(&dir.path().join("photo_1.png"));

        let paths = resolve_output_paths(None, &[input], 1);
        assert_eq!(paths, vec![dir.path().join("photo_2.png")]);
    }

    #[test]
    fn gaps_between_existing_files_are_used() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("photo.jpg");
        touch(&input);
        touch(&dir.path().join("photo_1.png"));
        touch(&dir.path().join("photo_3.png"));

        let paths = resolve_output_paths(None, &[input], 2);
        assert_eq!(
            paths,
            vec![
                dir.path().join("photo_2.png"),
                dir.path().join("photo_4.png"),
            ]
        );
    }

    #[test]
    fn explicit_output_with_single_count_is_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("exact.png");
        touch(&out); // even an existing file is reused verbatim

        let paths = resolve_output_paths(Some(&out), &[], 1);
        assert_eq!(paths, vec![out]);
    }

    #[test]
    fn explicit_output_with_multiple_count_numbers_the_stem() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("render.jpg");

        let paths = resolve_output_paths(Some(&out), &[], 2);
        assert_eq!(
            paths,
            vec![
                dir.path().join("render_1.jpg"),
                dir.path().join("render_2.jpg"),
            ]
        );
    }

    #[test]
    fn explicit_output_beats_input_derived_base() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("photo.jpg");
        touch(&input);
        let out = dir.path().join("edited.png");

        let paths = resolve_output_paths(Some(&out), &[input], 3);
        assert_eq!(
            paths,
            vec![
                dir.path().join("edited_1.png"),
                dir.path().join("edited_2.png"),
                dir.path().join("edited_3.png"),
            ]
        );
    }

    #[test]
    fn resolution_is_idempotent_without_writes() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("photo.jpg");
        touch(&input);
        touch(&dir.path().join("photo_2.png"));

        let inputs = vec![input];
        let first = resolve_output_paths(None, &inputs, 3);
        let second = resolve_output_paths(None, &inputs, 3);
        assert_eq!(first, second);
    }

    #[test]
    fn resolved_paths_are_distinct_and_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("photo.jpg");
        touch(&input);
        for k in [1, 2, 5, 6] {
            touch(&dir.path().join(format!("photo_{k}.png")));
        }

        let paths = resolve_output_paths(None, &[input], 4);
        assert_eq!(paths.len(), 4);
        for (i, path) in paths.iter().enumerate() {
            assert!(!path.exists(), "{} already exists", path.display());
            assert!(!paths[..i].contains(path), "duplicate {}", path.display());
        }
    }

    #[tokio::test]
    async fn writer_persists_all_images() {
        let dir = tempfile::tempdir().unwrap();
        let plan = vec![dir.path().join("a.png"), dir.path().join("b.png")];
        let images = vec![png(b"first"), png(b"second")];

        let written = write_images(&plan, &images).await.unwrap();
        assert_eq!(written, plan);
        assert_eq!(std::fs::read(&plan[0]).unwrap(), b"first");
        assert_eq!(std::fs::read(&plan[1]).unwrap(), b"second");
    }

    #[tokio::test]
    async fn writer_keeps_earlier_files_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("a.png");
        let bad = dir.path().join("missing-subdir").join("b.png");
        let plan = vec![good.clone(), bad];
        let images = vec![png(b"first"), png(b"second")];

        let err = write_images(&plan, &images).await.unwrap_err();
        assert!(matches!(err, ImageGenError::Write { .. }));
        assert_eq!(std::fs::read(&good).unwrap(), b"first");
    }
}
