use actix_web::{
    get,
    http::{
        header::{self, ContentType},
        Method,
    },
    post, route,
    web::{self, Data},
    HttpRequest, HttpResponse, Responder,
};
use actix_web_lab::respond::Html;
use database::{consts::consts::EntityId, model::person::NewPerson};
use serde::Deserialize;

use crate::{
    error::WebError,
    models::persons::Persons,
    views::{PersonFormState, Views},
};

const LIST_TITLE: &str = "List";
const NEW_TITLE: &str = "New";

/// Raw create form, fields are validated by [`NewPerson::parse`]
#[derive(Deserialize, Debug)]
pub struct PersonForm {
    name: Option<String>,
    age: Option<String>,
}

fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((header::LOCATION, location))
        .finish()
}

#[get("/")]
pub async fn index() -> impl Responder {
    redirect("/list")
}

#[get("/list")]
pub async fn list(persons: Data<Persons>, views: Data<Views>) -> Result<Html, WebError> {
    let persons = persons.find_all().await?;

    Ok(Html(views.list(LIST_TITLE, &persons)?))
}

#[get("/p/new")]
pub async fn new_form(views: Data<Views>) -> Result<Html, WebError> {
    Ok(Html(
        views.new_person(NEW_TITLE, &PersonFormState::default())?,
    ))
}

#[post("/p/new")]
pub async fn create(
    persons: Data<Persons>,
    views: Data<Views>,
    form: web::Form<PersonForm>,
) -> Result<HttpResponse, WebError> {
    let PersonForm { name, age } = form.into_inner();

    match NewPerson::parse(name.as_deref(), age.as_deref()) {
        Ok(new_person) => {
            let person = persons.create(new_person).await?;

            log::info!("Created person {}", person.id);

            Ok(redirect("/list"))
        }
        Err(errors) => {
            let form = PersonFormState {
                name: name.unwrap_or_default(),
                age: age.unwrap_or_default(),
                errors: errors.iter().map(ToString::to_string).collect(),
            };

            Ok(HttpResponse::BadRequest()
                .content_type(ContentType::html())
                .body(views.new_person(NEW_TITLE, &form)?))
        }
    }
}

/// Only non-safe methods delete, a `GET` to this path is not routed. Script clients sending
/// `DELETE` get a 303 so the follow-up request is a `GET`.
#[route("/p/delete/{id}", method = "POST", method = "DELETE")]
pub async fn delete(
    request: HttpRequest,
    persons: Data<Persons>,
    id: web::Path<String>,
) -> Result<HttpResponse, WebError> {
    persons
        .delete_by_id(&EntityId::from(id.into_inner()))
        .await?;

    if request.method() == Method::DELETE {
        return Ok(HttpResponse::SeeOther()
            .insert_header((header::LOCATION, "/list"))
            .finish());
    }

    Ok(redirect("/list"))
}
