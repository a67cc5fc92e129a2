use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

mod delete;
mod download;
mod list;
pub mod models;
mod share;
mod upload;

pub use delete::delete_file;
pub use download::{fetch_file_blob, prepare_destination, sanitize_file_name, BinaryVariant};
pub use list::list_files;
pub use models::{DownloadOutcome, ExpiresIn, FileRecord, Page, ShareLink, PAGE_SIZE};
pub use share::create_share_link;
pub use upload::{
    upload_file, ProgressCallback, UploadRequest, ALLOWED_UPLOAD_MIME_TYPES, MAX_UPLOAD_BYTES,
};

/// URL 路径段里需要转义的字符集。保留字符（`-` `_` `.` `~`、字母数字）
/// 原样保留，服务端按字面匹配文件 id。
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'?')
    .add(b'<')
    .add(b'>')
    .add(b'`');

/// 把文件 id 编码成单个路径段。
pub(crate) fn encode_path_segment(raw: &str) -> String {
    utf8_percent_encode(raw, PATH_SEGMENT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreserved_characters_pass_through_unencoded() {
        assert_eq!(encode_path_segment("f-new"), "f-new");
        assert_eq!(
            encode_path_segment("0b7e3d4a-9c1f-4e2b-8d5a-6f7c8e9d0a1b"),
            "0b7e3d4a-9c1f-4e2b-8d5a-6f7c8e9d0a1b"
        );
        assert_eq!(encode_path_segment("report_v2.pdf~"), "report_v2.pdf~");
    }

    #[test]
    fn delimiters_and_spaces_are_escaped() {
        assert_eq!(encode_path_segment("a/b"), "a%2Fb");
        assert_eq!(encode_path_segment("a b"), "a%20b");
        assert_eq!(encode_path_segment("a?b#c"), "a%3Fb%23c");
        assert_eq!(encode_path_segment("100%"), "100%25");
    }
}
