//! [MS-CFB](https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-cfb/53989ce4-7b05-4f8d-829b-d08d6148375b)
//! compound file binary container.

pub mod dirent;
pub mod fat;
pub mod header;

pub use dirent::{Dirent, DirentType, DirectoryTree, NOSTREAM};
pub use fat::{SectorTable, MAX_CHAIN_LENGTH};
pub use header::{
    CfbHeader, CFB_MAGIC, SECTOR_DIFAT, SECTOR_END_OF_CHAIN, SECTOR_FAT, SECTOR_FREE,
};

use mailbag_mapi::ByteWindow;

use crate::MsgError;

/// A parsed compound file: header, allocation tables, directory tree and the
/// root's mini stream, all derived once from the blob at open time.
pub struct CompoundFile {
    blob: Vec<u8>,
    header: CfbHeader,
    fat: SectorTable,
    mini_fat: SectorTable,
    directory: DirectoryTree,
    mini_stream: Vec<u8>,
}

impl CompoundFile {
    pub fn parse(blob: Vec<u8>) -> Result<Self, MsgError> {
        let win = ByteWindow::new(&blob);
        let header = CfbHeader::parse(&win)?;
        let fat = fat::build_fat(&win, &header);
        let mini_fat = fat::build_mini_fat(&win, &header, &fat);

        let dir_stream = fat::read_stream(&win, &header, &fat, header.dir_start_sector);
        let directory = DirectoryTree::parse(&dir_stream, header.major_version);

        // The mini stream is the root entry's regular stream, truncated to
        // the root entry's size.
        let mini_stream = match directory.root() {
            Some(root) => {
                let mut data = fat::read_stream(&win, &header, &fat, root.start_sector);
                data.truncate(root.size as usize);
                data
            }
            None => Vec::new(),
        };

        Ok(Self {
            blob,
            header,
            fat,
            mini_fat,
            directory,
            mini_stream,
        })
    }

    pub fn header(&self) -> &CfbHeader {
        &self.header
    }

    pub fn directory(&self) -> &DirectoryTree {
        &self.directory
    }

    pub fn root(&self) -> Option<&Dirent> {
        self.directory.root()
    }

    pub fn blob(&self) -> &[u8] {
        &self.blob
    }

    /// The stream content behind a dirent. Streams smaller than the mini
    /// cutoff live in the mini stream; the root (the mini stream itself) and
    /// everything at or above the cutoff read from the FAT.
    pub fn stream_bytes(&self, dirent: &Dirent) -> Vec<u8> {
        let win = ByteWindow::new(&self.blob);
        let size = dirent.size as usize;
        if dirent.dirent_type != DirentType::Root
            && dirent.size < u64::from(self.header.mini_cutoff)
        {
            return fat::read_mini_stream(
                &self.mini_stream,
                &self.mini_fat,
                self.header.mini_sector_size,
                dirent.start_sector,
                size,
            );
        }
        let mut data = fat::read_stream(&win, &self.header, &self.fat, dirent.start_sector);
        data.truncate(size);
        data
    }

    pub fn children(&self, parent: &Dirent) -> Vec<&Dirent> {
        self.directory.children(parent)
    }

    pub fn find_child(&self, parent: &Dirent, name: &str) -> Option<&Dirent> {
        self.directory.find_child(parent, name)
    }
}
