use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::time::SystemTime;

use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub(crate) fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create archive parent");
    }
    let file = File::create(path).expect("create archive");
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    for (name, data) in entries {
        writer.start_file(*name, options).expect("start entry");
        writer.write_all(data).expect("write entry");
    }
    writer.finish().expect("finish archive");
}

pub(crate) fn write_empty_zip(path: &Path) {
    write_zip(path, &[]);
}

/// Sets the modification time of every file below `root`.
pub(crate) fn age_tree(root: &Path, modified: SystemTime) {
    for entry in WalkDir::new(root).into_iter().filter_map(|entry| entry.ok()) {
        if entry.file_type().is_file() {
            let file = File::options()
                .write(true)
                .open(entry.path())
                .expect("open for mtime");
            file.set_modified(modified).expect("set mtime");
        }
    }
}
