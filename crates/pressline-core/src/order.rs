// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Ready-made orderings for listing printed documents.

use std::cmp::Ordering;

use crate::types::SharedDocument;

/// Caller-supplied ordering for document listings.
pub type DocumentOrder = Box<dyn Fn(&SharedDocument, &SharedDocument) -> Ordering + Send>;

/// Name, ascending. The default listing order.
pub fn by_name(a: &SharedDocument, b: &SharedDocument) -> Ordering {
    a.name().cmp(b.name())
}

/// Medium width, narrowest first.
pub fn by_width(a: &SharedDocument, b: &SharedDocument) -> Ordering {
    a.size().width_mm.cmp(&b.size().width_mm)
}

/// Print duration, shortest first.
pub fn by_print_duration(a: &SharedDocument, b: &SharedDocument) -> Ordering {
    a.print_duration().cmp(&b.print_duration())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::paper::IsoPaperSize;
    use crate::types::Document;

    #[test]
    fn orderings_disagree_where_expected() {
        let mut docs: Vec<SharedDocument> = vec![
            Document::new("a")
                .with_size(IsoPaperSize::A4)
                .with_print_duration(Duration::from_secs(1))
                .shared(),
            Document::new("b")
                .with_size(IsoPaperSize::A5)
                .with_print_duration(Duration::ZERO)
                .shared(),
            Document::new("c")
                .with_size(IsoPaperSize::A3)
                .with_print_duration(Duration::from_secs(2))
                .shared(),
        ];
        let names = |docs: &[SharedDocument]| {
            docs.iter().map(|d| d.name().to_string()).collect::<Vec<_>>()
        };

        docs.sort_by(by_width);
        assert_eq!(names(&docs), ["b", "a", "c"]);

        docs.sort_by(by_name);
        assert_eq!(names(&docs), ["a", "b", "c"]);

        docs.sort_by(by_print_duration);
        assert_eq!(names(&docs), ["b", "a", "c"]);
    }
}
