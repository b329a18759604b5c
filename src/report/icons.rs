//! Inline SVG icons for tools

macro_rules! icon {
    ($body:literal) => {
        concat!(
            r#"<svg class="tool-icon" xmlns="http://www.w3.org/2000/svg" viewBox="0 0 24 24" fill="none" stroke="currentColor" stroke-width="2" stroke-linecap="round" stroke-linejoin="round">"#,
            $body,
            "</svg>"
        )
    };
}

const READ: &str = icon!(
    r#"<path d="M2 3h6a4 4 0 0 1 4 4v14a3 3 0 0 0-3-3H2z"/><path d="M22 3h-6a4 4 0 0 0-4 4v14a3 3 0 0 1 3-3h7z"/>"#
);
const WRITE: &str = icon!(
    r#"<path d="M14 2H6a2 2 0 0 0-2 2v16a2 2 0 0 0 2 2h12a2 2 0 0 0 2-2V8z"/><polyline points="14 2 14 8 20 8"/><line x1="12" y1="18" x2="12" y2="12"/><line x1="9" y1="15" x2="15" y2="15"/>"#
);
const EDIT: &str = icon!(r#"<path d="M12 20h9"/><path d="M16.5 3.5a2.1 2.1 0 0 1 3 3L7 19l-4 1 1-4z"/>"#);
const MULTI_EDIT: &str = icon!(
    r#"<path d="M12 20h9"/><path d="M16.5 3.5a2.1 2.1 0 0 1 3 3L7 19l-4 1 1-4z"/><line x1="3" y1="4" x2="9" y2="4"/><line x1="3" y1="8" x2="7" y2="8"/>"#
);
const BASH: &str = icon!(r#"<polyline points="4 17 10 11 4 5"/><line x1="12" y1="19" x2="20" y2="19"/>"#);
const GLOB: &str = icon!(r#"<path d="M22 19a2 2 0 0 1-2 2H4a2 2 0 0 1-2-2V5a2 2 0 0 1 2-2h5l2 3h9a2 2 0 0 1 2 2z"/>"#);
const GREP: &str = icon!(r#"<circle cx="11" cy="11" r="8"/><line x1="21" y1="21" x2="16.65" y2="16.65"/>"#);
const WEB_FETCH: &str = icon!(
    r#"<circle cx="12" cy="12" r="10"/><line x1="2" y1="12" x2="22" y2="12"/><path d="M12 2a15.3 15.3 0 0 1 4 10 15.3 15.3 0 0 1-4 10 15.3 15.3 0 0 1-4-10 15.3 15.3 0 0 1 4-10z"/>"#
);
const WEB_SEARCH: &str = icon!(
    r#"<circle cx="10" cy="10" r="7"/><line x1="21" y1="21" x2="15" y2="15"/><line x1="3" y1="10" x2="17" y2="10"/>"#
);
const TASK: &str = icon!(
    r#"<rect x="4" y="4" width="16" height="16" rx="2"/><rect x="9" y="9" width="6" height="6"/><line x1="9" y1="1" x2="9" y2="4"/><line x1="15" y1="1" x2="15" y2="4"/><line x1="9" y1="20" x2="9" y2="23"/><line x1="15" y1="20" x2="15" y2="23"/>"#
);
const TODO_WRITE: &str = icon!(r#"<polyline points="9 11 12 14 22 4"/><path d="M21 12v7a2 2 0 0 1-2 2H5a2 2 0 0 1-2-2V5a2 2 0 0 1 2-2h11"/>"#);
const NOTEBOOK_EDIT: &str = icon!(
    r#"<path d="M4 19.5A2.5 2.5 0 0 1 6.5 17H20"/><path d="M6.5 2H20v20H6.5A2.5 2.5 0 0 1 4 19.5v-15A2.5 2.5 0 0 1 6.5 2z"/>"#
);
const DEFAULT: &str = icon!(r#"<circle cx="12" cy="12" r="3"/><circle cx="12" cy="12" r="9"/>"#);

pub fn tool_icon(tool_name: &str) -> &'static str {
    match tool_name {
        "Read" => READ,
        "Write" => WRITE,
        "Edit" => EDIT,
        "MultiEdit" => MULTI_EDIT,
        "Bash" => BASH,
        "Glob" => GLOB,
        "Grep" => GREP,
        "WebFetch" => WEB_FETCH,
        "WebSearch" => WEB_SEARCH,
        "Task" => TASK,
        "TodoWrite" => TODO_WRITE,
        "NotebookEdit" => NOTEBOOK_EDIT,
        _ => DEFAULT,
    }
}
