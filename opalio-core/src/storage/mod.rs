pub mod blob_store;
pub mod metadata_store;

pub(crate) const DIR_MODE: u32 = 0o2710;
pub(crate) const BLOB_MODE: u32 = 0o440;
pub(crate) const META_MODE: u32 = 0o400;

#[cfg(unix)]
pub(crate) fn set_mode(path: &std::path::Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
pub(crate) fn set_mode(_path: &std::path::Path, _mode: u32) -> std::io::Result<()> {
    Ok(())
}
