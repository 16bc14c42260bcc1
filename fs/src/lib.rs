pub mod file;

pub use self::file::LocalFile;

#[cfg(feature = "mocks")]
pub mod mock {
    use std::io;
    use std::path::Path;
    use std::path::PathBuf;

    use super::file::reader::FileReader;
    use mockall::mock;

    mock! {
        pub LocalFile {}

        impl FileReader for LocalFile {
            fn read(&self, file_path: &Path) -> io::Result<String>;
            fn dir_entries(&self, dir_path: &Path) -> io::Result<Vec<PathBuf>>;
        }
    }
}
