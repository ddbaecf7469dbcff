
/// One record of a clippings export, terminated by the standard delimiter.
pub(crate) fn record(title_line: &str, metadata_line: &str, content: &str) -> String {
    format!("{title_line}\n{metadata_line}\n\n{content}\n==========\n")
}
