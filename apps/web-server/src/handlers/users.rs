//! Account pages: signup, login, logout and the password flows.

use actix_web::{HttpResponse, web};
use serde::Deserialize;

use yatube_core::domain::User;
use yatube_core::error::RepoError;
use yatube_core::ports::{BaseRepository, PasswordService, TokenService, UserRepository, roles};
use yatube_shared::FormErrors;
use yatube_shared::forms::{
    LoginForm, PasswordChangeForm, PasswordResetForm, SetPasswordForm, SignupForm,
};

use crate::middleware::auth::{self, Identity, OptionalIdentity};
use crate::middleware::error::AppResult;
use crate::state::AppState;
use crate::views;

const USERNAME_TAKEN: &str = "A user with that username already exists.";
const BAD_CREDENTIALS: &str = "Please enter a correct username and password. Note that both fields may be case-sensitive.";
const WRONG_OLD_PASSWORD: &str =
    "Your old password was entered incorrectly. Please enter it again.";

fn render_form<T: serde::Serialize>(
    template: &str,
    viewer: Option<&Identity>,
    form: &T,
    errors: &FormErrors,
) -> AppResult<HttpResponse> {
    let mut context = views::page_context(viewer);
    context.insert("form", form);
    views::insert_errors(&mut context, errors);
    views::render(template, &context)
}

pub async fn signup_form(viewer: OptionalIdentity) -> AppResult<HttpResponse> {
    render_form(
        "users/signup.html",
        viewer.0.as_ref(),
        &SignupForm::default(),
        &FormErrors::default(),
    )
}

pub async fn signup(
    state: web::Data<AppState>,
    form: web::Form<SignupForm>,
) -> AppResult<HttpResponse> {
    let mut form = form.into_inner();
    let mut errors = form.clean().err().unwrap_or_default();
    if !errors.has("username") && state.users.find_by_username(&form.username).await?.is_some() {
        errors.add("username", USERNAME_TAKEN);
    }
    if !errors.is_empty() {
        return render_form("users/signup.html", None, &form, &errors);
    }

    let password_hash = state.passwords.hash(&form.password1)?;
    let user = User::new(form.username.clone(), form.email.clone(), password_hash)
        .with_names(form.first_name.clone(), form.last_name.clone());

    match state.users.create(user).await {
        Ok(user) => {
            tracing::info!(user_id = %user.id, username = %user.username, "User signed up");
            Ok(views::redirect("/"))
        }
        Err(RepoError::Constraint(_)) => {
            let mut errors = FormErrors::default();
            errors.add("username", USERNAME_TAKEN);
            render_form("users/signup.html", None, &form, &errors)
        }
        Err(e) => Err(e.into()),
    }
}

#[derive(Debug, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

pub async fn login_form(
    viewer: OptionalIdentity,
    query: web::Query<NextQuery>,
) -> AppResult<HttpResponse> {
    let form = LoginForm {
        next: query.into_inner().next,
        ..Default::default()
    };
    render_form(
        "users/login.html",
        viewer.0.as_ref(),
        &form,
        &FormErrors::default(),
    )
}

pub async fn login(
    state: web::Data<AppState>,
    form: web::Form<LoginForm>,
) -> AppResult<HttpResponse> {
    let mut form = form.into_inner();
    if let Err(errors) = form.clean() {
        return render_form("users/login.html", None, &form, &errors);
    }

    let user = state.users.find_by_username(&form.username).await?;
    let verified = match &user {
        Some(user) => state.passwords.verify(&form.password, &user.password_hash)?,
        None => {
            state.passwords.verify_dummy(&form.password);
            false
        }
    };
    let Some(user) = user.filter(|_| verified) else {
        tracing::warn!(username = %form.username, "Failed login attempt");
        return render_form(
            "users/login.html",
            None,
            &form,
            &FormErrors::non_field(BAD_CREDENTIALS),
        );
    };

    let token = state
        .tokens
        .generate_token(user.id, &user.username, vec![roles::USER.to_string()])?;
    tracing::info!(user_id = %user.id, "User logged in");

    let target = form.safe_next().unwrap_or("/");
    Ok(HttpResponse::Found()
        .insert_header((actix_web::http::header::LOCATION, target))
        .cookie(auth::session_cookie(&state, token))
        .finish())
}

pub async fn logout(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let html = crate::templates::render("users/logged_out.html", &views::page_context(None))?;
    Ok(HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .cookie(auth::expired_session_cookie(&state))
        .body(html))
}

pub async fn password_change_form(viewer: Identity) -> AppResult<HttpResponse> {
    render_form(
        "users/password_change_form.html",
        Some(&viewer),
        &(),
        &FormErrors::default(),
    )
}

pub async fn password_change(
    state: web::Data<AppState>,
    viewer: Identity,
    form: web::Form<PasswordChangeForm>,
) -> AppResult<HttpResponse> {
    let form = form.into_inner();
    let Some(mut user) = state.users.find_by_id(viewer.user_id).await? else {
        // Session outlived the account
        return Ok(views::redirect(&auth::login_url("/auth/password_change/")));
    };

    let mut errors = form.clean().err().unwrap_or_default();
    if !form.old_password.is_empty()
        && !state
            .passwords
            .verify(&form.old_password, &user.password_hash)?
    {
        errors.add("old_password", WRONG_OLD_PASSWORD);
    }
    if !errors.is_empty() {
        return render_form(
            "users/password_change_form.html",
            Some(&viewer),
            &(),
            &errors,
        );
    }

    user.set_password_hash(state.passwords.hash(&form.new_password1)?);
    state.users.update(user).await?;
    tracing::info!(user_id = %viewer.user_id, "Password changed");

    Ok(views::redirect("/auth/password_change/done/"))
}

pub async fn password_change_done(viewer: Identity) -> AppResult<HttpResponse> {
    views::render(
        "users/password_change_done.html",
        &views::page_context(Some(&viewer)),
    )
}

pub async fn password_reset_form(viewer: OptionalIdentity) -> AppResult<HttpResponse> {
    render_form(
        "users/password_reset_form.html",
        viewer.0.as_ref(),
        &PasswordResetForm::default(),
        &FormErrors::default(),
    )
}

/// Issue a reset link when the email is known. The response is the same
/// either way.
pub async fn password_reset(
    state: web::Data<AppState>,
    form: web::Form<PasswordResetForm>,
) -> AppResult<HttpResponse> {
    let mut form = form.into_inner();
    if let Err(errors) = form.clean() {
        return render_form("users/password_reset_form.html", None, &form, &errors);
    }

    if let Some(user) = state.users.find_by_email(&form.email).await? {
        let token = state.tokens.generate_token(
            user.id,
            &user.username,
            vec![roles::PASSWORD_RESET.to_string()],
        )?;
        let link = format!("/auth/reset/{}/{}/", user.id, token);
        tracing::info!(user_id = %user.id, link = %link, "Password reset link issued");
    } else {
        tracing::debug!("Password reset requested for unknown email");
    }

    Ok(views::redirect("/auth/password_reset/done/"))
}

pub async fn password_reset_done(viewer: OptionalIdentity) -> AppResult<HttpResponse> {
    views::render(
        "users/password_reset_done.html",
        &views::page_context(viewer.0.as_ref()),
    )
}

/// The account a reset link is for, if the link is still good. A link stops
/// working once the password has changed after it was issued.
async fn reset_target(state: &AppState, uid: &str, token: &str) -> AppResult<Option<User>> {
    let Ok(claims) = state.tokens.validate_token(token) else {
        return Ok(None);
    };
    if !claims.has_role(roles::PASSWORD_RESET) || claims.user_id.to_string() != uid {
        return Ok(None);
    }
    let Some(user) = state.users.find_by_id(claims.user_id).await? else {
        return Ok(None);
    };
    let issued_at = claims.exp - state.tokens.expiration_seconds();
    if user.updated_at.timestamp() > issued_at {
        return Ok(None);
    }
    Ok(Some(user))
}

fn render_reset_confirm(validlink: bool, errors: &FormErrors) -> AppResult<HttpResponse> {
    let mut context = views::page_context(None);
    context.insert("validlink", &validlink);
    views::insert_errors(&mut context, errors);
    views::render("users/password_reset_confirm.html", &context)
}

pub async fn password_reset_confirm_form(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> AppResult<HttpResponse> {
    let (uid, token) = path.into_inner();
    let valid = reset_target(&state, &uid, &token).await?.is_some();
    render_reset_confirm(valid, &FormErrors::default())
}

pub async fn password_reset_confirm(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
    form: web::Form<SetPasswordForm>,
) -> AppResult<HttpResponse> {
    let (uid, token) = path.into_inner();
    let Some(mut user) = reset_target(&state, &uid, &token).await? else {
        return render_reset_confirm(false, &FormErrors::default());
    };
    if let Err(errors) = form.clean() {
        return render_reset_confirm(true, &errors);
    }

    user.set_password_hash(state.passwords.hash(&form.new_password1)?);
    let user = state.users.update(user).await?;
    tracing::info!(user_id = %user.id, "Password reset completed");

    Ok(views::redirect("/auth/reset/done/"))
}

pub async fn password_reset_complete(viewer: OptionalIdentity) -> AppResult<HttpResponse> {
    views::render(
        "users/password_reset_complete.html",
        &views::page_context(viewer.0.as_ref()),
    )
}
