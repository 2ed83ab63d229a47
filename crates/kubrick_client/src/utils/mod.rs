pub mod http_utils;

/// Last path segment of a server-side path (`shared_media/clip.mp4` -> `clip.mp4`).
pub fn media_file_name(path: &str) -> &str {
    path.rsplit(&['/', '\\'][..]).next().unwrap_or(path)
}
