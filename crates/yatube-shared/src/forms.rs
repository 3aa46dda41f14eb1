//! HTML form payloads and their validation rules.
//!
//! Field-level rules are declared with `validator`; rules that span fields
//! or need more than a length check live in `clean()` methods, which return
//! every problem as [`FormErrors`] so the form can be re-rendered.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use image::ImageFormat;
use validator::Validate;

use crate::errors::FormErrors;

pub const USERNAME_MAX_LEN: usize = 150;
pub const PASSWORD_MIN_LEN: usize = 8;

/// Image formats a post may carry.
const ACCEPTED_FORMATS: [ImageFormat; 5] = [
    ImageFormat::Gif,
    ImageFormat::Png,
    ImageFormat::Jpeg,
    ImageFormat::WebP,
    ImageFormat::Bmp,
];

/// Post creation / edit form. `group` holds the raw select value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct PostForm {
    #[serde(default)]
    #[validate(length(min = 1, message = "Enter the post text."))]
    pub text: String,
    #[serde(default)]
    pub group: Option<String>,
}

impl PostForm {
    /// Validate and return the selected group id, if any. Whether the group
    /// exists is checked by the caller.
    pub fn clean(&mut self) -> Result<Option<Uuid>, FormErrors> {
        self.text = self.text.trim().to_string();
        let mut errors = FormErrors::from_validation(self.validate());

        let group = match self.group.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => match Uuid::parse_str(raw) {
                Ok(id) => Some(id),
                Err(_) => {
                    errors.add("group", "Select a valid choice.");
                    None
                }
            },
        };

        errors.into_result(group)
    }
}

/// An image file received with a post form.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub data: Vec<u8>,
}

impl ImageUpload {
    /// Format of the upload when it is a supported image that decodes in
    /// full. A valid header over a broken body is rejected.
    pub fn image_format(&self) -> Option<ImageFormat> {
        let format = image::guess_format(&self.data).ok()?;
        if !ACCEPTED_FORMATS.contains(&format) {
            return None;
        }
        image::load_from_memory_with_format(&self.data, format).ok()?;
        Some(format)
    }

    /// Check the upload and build its storage key under `posts/`.
    pub fn clean(&self) -> Result<String, FormErrors> {
        let mut errors = FormErrors::default();
        if self.data.is_empty() {
            errors.add("image", "The submitted file is empty.");
            return Err(errors);
        }
        let Some(ext) = self
            .image_format()
            .and_then(|format| format.extensions_str().first().copied())
        else {
            errors.add(
                "image",
                "Upload a valid image. The file you uploaded was either not an image or a corrupted image.",
            );
            return Err(errors);
        };
        Ok(format!("posts/{}", Self::safe_file_name(&self.file_name, ext)))
    }

    /// Keep `[A-Za-z0-9._-]` from the client's file name and make sure the
    /// extension matches the content.
    fn safe_file_name(raw: &str, ext: &str) -> String {
        let base = raw.rsplit(['/', '\\']).next().unwrap_or_default();
        let stem = match base.rsplit_once('.') {
            Some((stem, _)) => stem,
            None => base,
        };
        let stem: String = stem
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let stem = stem.trim_matches('_');
        let stem = if stem.is_empty() { "image" } else { stem };
        format!("{stem}.{ext}")
    }
}

/// Comment form.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CommentForm {
    #[serde(default)]
    #[validate(length(min = 1, message = "Enter the comment text."))]
    pub text: String,
}

impl CommentForm {
    pub fn clean(&mut self) -> Result<(), FormErrors> {
        self.text = self.text.trim().to_string();
        FormErrors::from_validation(self.validate()).into_result(())
    }
}

/// Account registration form.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct SignupForm {
    #[serde(default)]
    #[validate(length(max = 150))]
    pub first_name: String,
    #[serde(default)]
    #[validate(length(max = 150))]
    pub last_name: String,
    #[validate(length(min = 1, max = 150, message = "Enter a username of at most 150 characters."))]
    pub username: String,
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
    #[serde(default)]
    #[serde(skip_serializing)]
    pub password1: String,
    #[serde(default)]
    #[serde(skip_serializing)]
    pub password2: String,
}

impl SignupForm {
    pub fn clean(&mut self) -> Result<(), FormErrors> {
        self.username = self.username.trim().to_string();
        self.email = self.email.trim().to_string();
        let mut errors = FormErrors::from_validation(self.validate());

        if !self.username.is_empty() && !valid_username(&self.username) {
            errors.add(
                "username",
                "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
            );
        }
        check_new_password(&mut errors, "password2", &self.password1, &self.password2);

        errors.into_result(())
    }
}

/// Login form. `next` is where to go afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    #[serde(skip_serializing)]
    pub password: String,
    #[serde(default)]
    pub next: Option<String>,
}

impl LoginForm {
    pub fn clean(&mut self) -> Result<(), FormErrors> {
        self.username = self.username.trim().to_string();
        let mut errors = FormErrors::default();
        if self.username.is_empty() {
            errors.add("username", "This field is required.");
        }
        if self.password.is_empty() {
            errors.add("password", "This field is required.");
        }
        errors.into_result(())
    }

    /// The redirect target, if it stays on this site.
    pub fn safe_next(&self) -> Option<&str> {
        self.next.as_deref().filter(|next| is_safe_redirect(next))
    }
}

/// Password change form for a logged-in user.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PasswordChangeForm {
    #[serde(default)]
    pub old_password: String,
    #[serde(default)]
    pub new_password1: String,
    #[serde(default)]
    pub new_password2: String,
}

impl PasswordChangeForm {
    pub fn clean(&self) -> Result<(), FormErrors> {
        let mut errors = FormErrors::default();
        if self.old_password.is_empty() {
            errors.add("old_password", "This field is required.");
        }
        check_new_password(
            &mut errors,
            "new_password2",
            &self.new_password1,
            &self.new_password2,
        );
        errors.into_result(())
    }
}

/// Password reset request form.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct PasswordResetForm {
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
}

impl PasswordResetForm {
    pub fn clean(&mut self) -> Result<(), FormErrors> {
        self.email = self.email.trim().to_string();
        FormErrors::from_validation(self.validate()).into_result(())
    }
}

/// New password form reached from a reset link.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SetPasswordForm {
    #[serde(default)]
    pub new_password1: String,
    #[serde(default)]
    pub new_password2: String,
}

impl SetPasswordForm {
    pub fn clean(&self) -> Result<(), FormErrors> {
        let mut errors = FormErrors::default();
        check_new_password(
            &mut errors,
            "new_password2",
            &self.new_password1,
            &self.new_password2,
        );
        errors.into_result(())
    }
}

fn valid_username(username: &str) -> bool {
    username.chars().count() <= USERNAME_MAX_LEN
        && username
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
}

fn check_new_password(errors: &mut FormErrors, field: &str, password: &str, confirmation: &str) {
    if password.chars().count() < PASSWORD_MIN_LEN {
        errors.add(
            field,
            "This password is too short. It must contain at least 8 characters.",
        );
    }
    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        errors.add(field, "This password is entirely numeric.");
    }
    if password != confirmation {
        errors.add(field, "The two password fields didn't match.");
    }
}

/// A redirect target is safe when it is a path on this site.
pub fn is_safe_redirect(target: &str) -> bool {
    target.starts_with('/') && !target.starts_with("//") && !target.contains('\\')
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL_GIF: &[u8] = b"GIF89a\x02\x00\x01\x00\x80\x00\x00\x00\x00\x00\xFF\xFF\xFF!\xF9\x04\x00\x00\x00\x00\x00,\x00\x00\x00\x00\x02\x00\x01\x00\x00\x02\x02\x0C\n\x00;";

    #[test]
    fn blank_post_text_is_rejected() {
        let mut form = PostForm {
            text: "   \n ".to_string(),
            group: None,
        };
        let errors = form.clean().unwrap_err();
        assert!(errors.has("text"));
    }

    #[test]
    fn post_group_must_be_uuid() {
        let mut form = PostForm {
            text: "hello".to_string(),
            group: Some("not-a-uuid".to_string()),
        };
        assert!(form.clean().unwrap_err().has("group"));

        let id = Uuid::new_v4();
        let mut form = PostForm {
            text: "hello".to_string(),
            group: Some(id.to_string()),
        };
        assert_eq!(form.clean().unwrap(), Some(id));

        let mut form = PostForm {
            text: "hello".to_string(),
            group: Some(String::new()),
        };
        assert_eq!(form.clean().unwrap(), None);
    }

    #[test]
    fn gif_upload_keeps_name_under_posts() {
        let upload = ImageUpload {
            file_name: "small.gif".to_string(),
            data: SMALL_GIF.to_vec(),
        };
        assert_eq!(upload.clean().unwrap(), "posts/small.gif");
    }

    #[test]
    fn upload_extension_follows_content() {
        let upload = ImageUpload {
            file_name: "../../etc/passwd.png".to_string(),
            data: SMALL_GIF.to_vec(),
        };
        assert_eq!(upload.clean().unwrap(), "posts/passwd.gif");
    }

    #[test]
    fn non_image_upload_is_rejected() {
        let upload = ImageUpload {
            file_name: "notes.txt".to_string(),
            data: b"plain text".to_vec(),
        };
        assert!(upload.clean().unwrap_err().has("image"));
    }

    #[test]
    fn bitmap_magic_alone_is_not_an_image() {
        let upload = ImageUpload {
            file_name: "notes.txt".to_string(),
            data: b"BMW owners club meeting notes".to_vec(),
        };
        assert!(upload.clean().unwrap_err().has("image"));
    }

    #[test]
    fn truncated_png_is_rejected() {
        let upload = ImageUpload {
            file_name: "x.png".to_string(),
            data: b"\x89PNG\r\n\x1a\ngarbage".to_vec(),
        };
        assert!(upload.clean().unwrap_err().has("image"));
    }

    #[test]
    fn decoded_gif_reports_its_format() {
        let upload = ImageUpload {
            file_name: "small.gif".to_string(),
            data: SMALL_GIF.to_vec(),
        };
        assert_eq!(upload.image_format(), Some(ImageFormat::Gif));
    }

    #[test]
    fn signup_checks_passwords_and_username() {
        let mut form = SignupForm {
            username: "bad name!".to_string(),
            email: "reader@example.com".to_string(),
            password1: "12345678".to_string(),
            password2: "12345679".to_string(),
            ..Default::default()
        };
        let errors = form.clean().unwrap_err();
        assert!(errors.has("username"));
        assert_eq!(errors.get("password2").len(), 2);
    }

    #[test]
    fn valid_signup_passes() {
        let mut form = SignupForm {
            first_name: "test_first_name".to_string(),
            last_name: "test_second_name".to_string(),
            username: "test_username".to_string(),
            email: "test_mail@mail.ru".to_string(),
            password1: "Testtest12345".to_string(),
            password2: "Testtest12345".to_string(),
        };
        assert!(form.clean().is_ok());
    }

    #[test]
    fn only_local_paths_are_safe_redirects() {
        assert!(is_safe_redirect("/posts/1/"));
        assert!(!is_safe_redirect("//evil.example/"));
        assert!(!is_safe_redirect("https://evil.example/"));
        assert!(!is_safe_redirect("/\\evil.example"));
    }
}
