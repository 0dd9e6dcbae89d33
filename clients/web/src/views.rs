use database::model::person::Person;
use serde::Serialize;
use tera::{Context, Tera};

/// What the create form shows: the submitted values and why they were rejected
#[derive(Serialize, Debug, Default)]
pub struct PersonFormState {
    pub name: String,
    pub age: String,
    pub errors: Vec<String>,
}

/// Server-side pages, compiled into the binary
pub struct Views {
    tera: Tera,
}

impl Views {
    pub fn new() -> Result<Self, tera::Error> {
        let mut tera = Tera::default();

        // `.html` names turn on autoescaping
        tera.add_raw_templates(vec![
            ("layout.html", include_str!("../templates/layout.html")),
            ("list.html", include_str!("../templates/list.html")),
            ("new.html", include_str!("../templates/new.html")),
        ])?;

        Ok(Self { tera })
    }

    pub fn list(&self, title: &str, persons: &[Person]) -> Result<String, tera::Error> {
        let mut context = Context::new();
        context.insert("title", title);
        context.insert("persons", persons);

        self.tera.render("list.html", &context)
    }

    pub fn new_person(&self, title: &str, form: &PersonFormState) -> Result<String, tera::Error> {
        let mut context = Context::new();
        context.insert("title", title);
        context.insert("form", form);

        self.tera.render("new.html", &context)
    }
}
