//! Deterministic fixture records shared by tests and examples.

use alexandria_types::{
    EditionRecord, ExternalRef, GeneratedBook, Isbn, PublicationDate,
};

/// A fully-populated fixture edition: Harry Potter and the Chamber of Secrets.
#[must_use]
pub fn chamber_of_secrets(source: &str) -> EditionRecord {
    let isbn = Isbn::parse("9780439064873").expect("fixture isbn");
    let mut record = EditionRecord::new(
        isbn.clone(),
        "Harry Potter and the Chamber of Secrets",
        source,
    );
    record.authors = vec!["J.K. Rowling".into()];
    record.publisher = Some("Scholastic".into());
    record.published = Some(PublicationDate::year(1999));
    record.page_count = Some(341);
    record.language = Some("en".into());
    record.cover_url = Some("https://covers.example/9780439064873-L.jpg".into());
    record.subjects = vec!["Fantasy".into(), "Magic".into()];
    record.external_ids = vec![ExternalRef {
        provider: "amazon".into(),
        id: "B000FCKGJG".into(),
    }];
    record.related_isbns = vec![isbn, Isbn::parse("0439064872").expect("fixture isbn")];
    record.confidence = 90;
    record
}

/// A sparse fixture edition: A Wizard of Earthsea, missing most fields.
#[must_use]
pub fn wizard_of_earthsea(source: &str) -> EditionRecord {
    let isbn = Isbn::parse("9780547773742").expect("fixture isbn");
    let mut record = EditionRecord::new(isbn, "A Wizard of Earthsea", source);
    record.authors = vec!["Ursula K. Le Guin".into()];
    record.confidence = 60;
    record
}

/// Generated-book fixtures with one valid and one absent ISBN.
#[must_use]
pub fn generated_batch() -> Vec<GeneratedBook> {
    vec![
        GeneratedBook {
            title: "Harry Potter and the Chamber of Secrets".into(),
            author: "J.K. Rowling".into(),
            isbn: Some(Isbn::parse("9780439064873").expect("fixture isbn")),
            confidence: 85,
        },
        GeneratedBook {
            title: "An Imagined Sequel".into(),
            author: "Nobody Real".into(),
            isbn: None,
            confidence: 20,
        },
    ]
}
