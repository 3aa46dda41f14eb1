//! Tera templates compiled into the binary.

use std::sync::LazyLock;

use tera::{Context, Tera};

macro_rules! embedded {
    ($($name:literal),* $(,)?) => {
        [$(($name, include_str!(concat!("../templates/", $name)))),*]
    };
}

static TEMPLATES: LazyLock<Result<Tera, tera::Error>> = LazyLock::new(|| {
    let mut tera = Tera::default();
    tera.add_raw_templates(embedded![
        "base.html",
        "macros.html",
        "posts/index.html",
        "posts/group_list.html",
        "posts/profile.html",
        "posts/follow.html",
        "posts/post_detail.html",
        "posts/create_post.html",
        "users/signup.html",
        "users/login.html",
        "users/logged_out.html",
        "users/password_change_form.html",
        "users/password_change_done.html",
        "users/password_reset_form.html",
        "users/password_reset_done.html",
        "users/password_reset_confirm.html",
        "users/password_reset_complete.html",
        "about/author.html",
        "about/tech.html",
        "core/403.html",
        "core/404.html",
        "core/500.html",
        "core/error.html",
    ])?;
    Ok(tera)
});

/// Parse every template up front so broken markup fails at startup.
pub fn init() -> Result<(), tera::Error> {
    match &*TEMPLATES {
        Ok(_) => Ok(()),
        Err(e) => Err(tera::Error::msg(format!("failed to load templates: {e}"))),
    }
}

/// Render a named template.
pub fn render(name: &str, context: &Context) -> Result<String, tera::Error> {
    match &*TEMPLATES {
        Ok(tera) => tera.render(name, context),
        Err(e) => Err(tera::Error::msg(format!("failed to load templates: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_templates_parse() {
        init().unwrap();
    }

    #[test]
    fn error_page_renders_without_viewer() {
        let mut context = Context::new();
        context.insert("viewer", &None::<()>);
        context.insert(
            "error",
            &yatube_shared::ErrorPage::not_found("/missing/"),
        );
        let html = render("core/404.html", &context).unwrap();
        assert!(html.contains("/missing/"));
    }
}
