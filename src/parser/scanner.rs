// Quote-aware character scanner shared by the statement accumulator and the
// tuple/value/schema splitters. It only tracks quote and backslash state; the
// callers decide what a top-level character means to them.

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct QuoteScanner {
    // The quote character that opened the current literal, if any.
    open: Option<char>,
    escape_next: bool,
}

impl QuoteScanner {
    pub fn new() -> Self {
        Self::default()
    }

    // Feed one character. Returns true when `c` sits at top level: outside any
    // quoted literal and not itself a quote delimiter or escaped character.
    pub fn advance(&mut self, c: char) -> bool {
        if self.escape_next {
            self.escape_next = false;
            return false;
        }
        if c == '\\' {
            self.escape_next = true;
            return false;
        }
        match self.open {
            Some(q) => {
                if c == q {
                    self.open = None;
                }
                false
            }
            None => {
                if c == '\'' || c == '"' {
                    self.open = Some(c);
                    false
                } else {
                    true
                }
            }
        }
    }

    // Feed a whole run of text, leaving the scanner positioned after it.
    pub fn advance_str(&mut self, text: &str) {
        for c in text.chars() {
            self.advance(c);
        }
    }

    // True while a literal is open. At the end of a statement this means the
    // text seen so far is incomplete.
    pub fn in_quotes(&self) -> bool {
        self.open.is_some()
    }
}
