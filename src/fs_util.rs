use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;
use zip::ZipArchive;

use crate::error::OkavangoError;

/// Sidecar files that make up one shapefile layer.
pub const SHAPEFILE_COMPONENTS: [&str; 5] = ["shp", "shx", "dbf", "prj", "cpg"];

fn is_shapefile_component(path: &Path) -> bool {
    path.extension()
        .map(|ext| {
            SHAPEFILE_COMPONENTS
                .iter()
                .any(|component| ext.eq_ignore_ascii_case(component))
        })
        .unwrap_or(false)
}

/// Unpacks the shapefile components of a zipped layer into `target_dir`.
///
/// Anything else in the archive (metadata, readmes, style files) is skipped.
/// Returns how many files were written.
pub fn extract_shapefile(zip_path: &Path, target_dir: &Path) -> Result<usize, OkavangoError> {
    let file = fs::File::open(zip_path).map_err(|err| {
        OkavangoError::Filesystem(format!("open zip {}: {err}", zip_path.display()))
    })?;
    let mut archive = ZipArchive::new(file)
        .map_err(|err| OkavangoError::Shapefile(format!("{}: {err}", zip_path.display())))?;

    let mut extracted = 0;
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|err| OkavangoError::Shapefile(err.to_string()))?;
        if entry.is_dir() {
            continue;
        }
        let relative = entry.enclosed_name().ok_or_else(|| {
            OkavangoError::Filesystem(format!("unsafe zip entry path: {}", entry.name()))
        })?;
        if !is_shapefile_component(&relative) {
            debug!(entry = %relative.display(), "skipping non-shapefile entry");
            continue;
        }

        let entry_path = target_dir.join(relative);
        if let Some(parent) = entry_path.parent() {
            fs::create_dir_all(parent).map_err(|err| OkavangoError::Filesystem(err.to_string()))?;
        }
        let mut outfile = fs::File::create(&entry_path)
            .map_err(|err| OkavangoError::Filesystem(err.to_string()))?;
        io::copy(&mut entry, &mut outfile)
            .map_err(|err| OkavangoError::Filesystem(err.to_string()))?;
        extracted += 1;
    }
    Ok(extracted)
}

/// First file under `root` (depth-first, sorted) with the given extension.
pub fn find_with_extension(root: &Path, extension: &str) -> Result<Option<PathBuf>, OkavangoError> {
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let mut entries = fs::read_dir(&dir)
            .map_err(|err| OkavangoError::Filesystem(err.to_string()))?
            .map(|entry| entry.map(|entry| entry.path()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| OkavangoError::Filesystem(err.to_string()))?;
        entries.sort();
        for path in entries {
            if path.is_dir() {
                stack.push(path);
            } else if path
                .extension()
                .map(|ext| ext.eq_ignore_ascii_case(extension))
                .unwrap_or(false)
            {
                return Ok(Some(path));
            }
        }
    }
    Ok(None)
}

pub fn write_bytes_atomic(path: &Path, content: &[u8]) -> Result<(), OkavangoError> {
    let parent = path
        .parent()
        .ok_or_else(|| OkavangoError::Filesystem("invalid destination path".to_string()))?;
    fs::create_dir_all(parent).map_err(|err| OkavangoError::Filesystem(err.to_string()))?;
    let mut temp = tempfile::Builder::new()
        .prefix(".okavango-write")
        .tempfile_in(parent)
        .map_err(|err| OkavangoError::Filesystem(err.to_string()))?;
    io::Write::write_all(temp.as_file_mut(), content)
        .map_err(|err| OkavangoError::Filesystem(err.to_string()))?;
    temp.persist(path)
        .map_err(|err| OkavangoError::Filesystem(err.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = fs::File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        for (name, content) in entries {
            writer
                .start_file(*name, zip::write::SimpleFileOptions::default())
                .unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn only_shapefile_components_are_extracted() {
        let temp = tempfile::tempdir().unwrap();
        let zip_path = temp.path().join("layer.zip");
        write_zip(
            &zip_path,
            &[
                ("README.txt", b"about"),
                ("layer/countries.dbf", b"dbf"),
                ("layer/countries.PRJ", b"prj"),
                ("layer/countries.qmd", b"qgis"),
            ],
        );
        let out = temp.path().join("out");

        let extracted = extract_shapefile(&zip_path, &out).unwrap();

        assert_eq!(extracted, 2);
        assert!(out.join("layer/countries.dbf").exists());
        assert!(out.join("layer/countries.PRJ").exists());
        assert!(!out.join("README.txt").exists());
        assert!(!out.join("layer/countries.qmd").exists());
    }

    #[test]
    fn traversal_entries_are_rejected() {
        let temp = tempfile::tempdir().unwrap();
        let zip_path = temp.path().join("evil.zip");
        write_zip(&zip_path, &[("../escape.shp", b"x")]);

        let err = extract_shapefile(&zip_path, &temp.path().join("out")).unwrap_err();

        assert!(matches!(err, OkavangoError::Filesystem(_)));
        assert!(!temp.path().join("escape.shp").exists());
    }

    #[test]
    fn finds_nested_extension_case_insensitively() {
        let temp = tempfile::tempdir().unwrap();
        let nested = temp.path().join("inner");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("countries.SHP"), b"").unwrap();
        fs::write(temp.path().join("readme.txt"), b"").unwrap();

        let found = find_with_extension(temp.path(), "shp").unwrap().unwrap();
        assert!(found.ends_with("inner/countries.SHP"));
        assert!(find_with_extension(temp.path(), "dbf").unwrap().is_none());
    }

    #[test]
    fn atomic_write_replaces_existing_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("out").join("a.json");
        write_bytes_atomic(&path, b"first").unwrap();
        write_bytes_atomic(&path, b"second").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"second");
    }
}
