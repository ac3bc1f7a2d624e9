//! Built-in lists of file extensions and media types that are never accepted.
//!
//! Both lists can be replaced from configuration; see `ForbiddenSets`.

/// Extensions of directly executable or script content, uppercase.
pub const DANGEROUS_EXT: &[&str] = &[
    "BAT", "CMD", "COM", "CPL", "DLL", "EXE", "HTA", "JAR", "JS", "JSE", "MSI", "MSP", "PIF",
    "PS1", "REG", "SCR", "SH", "VBE", "VBS", "WSF", "WSH",
];

/// Media types of executable content, lowercase. Covers both the values
/// commonly declared by clients and the values produced by content sniffing.
pub const DANGEROUS_MIME_TYPES: &[&str] = &[
    "application/hta",
    "application/java-archive",
    "application/javascript",
    "application/vnd.microsoft.portable-executable",
    "application/x-bat",
    "application/x-dosexec",
    "application/x-elf",
    "application/x-executable",
    "application/x-mach-binary",
    "application/x-ms-dos-executable",
    "application/x-msdownload",
    "application/x-msi",
    "application/x-sh",
    "application/x-sharedlib",
    "text/javascript",
    "text/x-shellscript",
];
