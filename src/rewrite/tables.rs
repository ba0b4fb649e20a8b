//! Table annotation state.
//!
//! Fed by the streaming HTML pass in `document.rs`: tag open/close events
//! and `<th>` text chunks go in, `data-label` values for `<td>` come out.
//! Nested tables each get their own frame on a stack.

#[derive(Debug, Default)]
struct TableFrame {
    headers: Vec<String>,
    in_thead: bool,
    in_tbody: bool,
    header_open: bool,
    column: usize,
}

impl TableFrame {
    fn close_header(&mut self) {
        if self.header_open {
            if let Some(last) = self.headers.last_mut() {
                *last = last.split_whitespace().collect::<Vec<_>>().join(" ");
            }
            self.header_open = false;
        }
    }
}

/// Tracks header labels for every open `<table>`.
#[derive(Debug, Default)]
pub struct TableAnnotator {
    stack: Vec<TableFrame>,
    labelled: usize,
}

impl TableAnnotator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_table(&mut self) {
        self.stack.push(TableFrame::default());
    }

    pub fn close_table(&mut self) {
        self.stack.pop();
    }

    pub fn enter_thead(&mut self) {
        if let Some(frame) = self.stack.last_mut() {
            frame.in_thead = true;
        }
    }

    pub fn leave_thead(&mut self) {
        if let Some(frame) = self.stack.last_mut() {
            frame.close_header();
            frame.in_thead = false;
        }
    }

    pub fn enter_tbody(&mut self) {
        if let Some(frame) = self.stack.last_mut() {
            // </thead> is optional
            frame.close_header();
            frame.in_thead = false;
            frame.in_tbody = true;
        }
    }

    pub fn leave_tbody(&mut self) {
        if let Some(frame) = self.stack.last_mut() {
            frame.in_tbody = false;
        }
    }

    pub fn start_row(&mut self) {
        if let Some(frame) = self.stack.last_mut() {
            frame.close_header();
            frame.column = 0;
        }
    }

    pub fn open_header_cell(&mut self) {
        if let Some(frame) = self.stack.last_mut() {
            frame.close_header();
            if frame.in_thead {
                frame.headers.push(String::new());
                frame.header_open = true;
            }
        }
    }

    pub fn header_text(&mut self, chunk: &str) {
        if let Some(frame) = self.stack.last_mut() {
            if frame.header_open {
                if let Some(last) = frame.headers.last_mut() {
                    last.push_str(chunk);
                }
            }
        }
    }

    pub fn close_header_cell(&mut self) {
        if let Some(frame) = self.stack.last_mut() {
            frame.close_header();
        }
    }

    /// Label for the `<td>` being opened, if it falls under a known header.
    pub fn data_cell_label(&mut self) -> Option<String> {
        let frame = self.stack.last_mut()?;
        frame.close_header();
        if !frame.in_tbody || frame.in_thead {
            return None;
        }
        let column = frame.column;
        frame.column += 1;
        let label = frame.headers.get(column).cloned()?;
        self.labelled += 1;
        Some(label)
    }

    /// Number of cells labelled so far.
    pub fn labelled(&self) -> usize {
        self.labelled
    }
}
