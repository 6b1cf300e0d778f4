use serde::{Deserialize, Serialize};

use super::repo::{Dietician, DieticianOption};
use crate::{
    auth::validate,
    error::{ApiError, ApiResult},
    images::services::MultipartForm,
    users::repo::User,
};

/// Registration form minus the optional `profileImage` file.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDietician {
    pub username: String,
    pub password: String,
    pub name: String,
    pub qualification: String,
    pub address: String,
    pub aadhar: String,
    pub pan: String,
    pub phone: String,
    pub email: String,
    pub work_exp: String,
    pub certificate: String,
    pub other_doc: String,
}

impl NewDietician {
    pub fn from_form(form: &MultipartForm) -> ApiResult<NewDietician> {
        let field = |name: &str| {
            form.text(name)
                .map(str::to_string)
                .ok_or_else(|| ApiError::validation("Please fill in all required fields"))
        };

        let d = NewDietician {
            username: field("username")?,
            password: field("password")?,
            name: field("name")?,
            qualification: field("qualification")?,
            address: field("address")?,
            aadhar: field("aadhar")?,
            pan: field("pan")?,
            phone: field("phone")?,
            email: field("email")?.to_lowercase(),
            work_exp: field("work_exp")?,
            certificate: field("certificate")?,
            other_doc: field("other_doc")?,
        };

        validate::password(&d.password)?;
        validate::email(&d.email)?;
        Ok(NewDietician {
            phone: validate::indian_mobile(&d.phone)?,
            ..d
        })
    }
}

/// Partial update; absent or blank fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateDietician {
    pub name: Option<String>,
    pub qualification: Option<String>,
    pub address: Option<String>,
    pub aadhar: Option<String>,
    pub pan: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    #[serde(alias = "work_exp")]
    pub work_exp: Option<String>,
    pub certificate: Option<String>,
    #[serde(alias = "other_doc")]
    pub other_doc: Option<String>,
}

impl UpdateDietician {
    pub fn validated(self) -> ApiResult<UpdateDietician> {
        let clean = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        let mut u = UpdateDietician {
            name: clean(self.name),
            qualification: clean(self.qualification),
            address: clean(self.address),
            aadhar: clean(self.aadhar),
            pan: clean(self.pan),
            phone: clean(self.phone),
            email: clean(self.email).map(|e| e.to_lowercase()),
            work_exp: clean(self.work_exp),
            certificate: clean(self.certificate),
            other_doc: clean(self.other_doc),
        };
        if u.is_empty() {
            return Err(ApiError::validation("Please update at least one field"));
        }
        if let Some(email) = &u.email {
            validate::email(email)?;
        }
        if let Some(phone) = u.phone.take() {
            u.phone = Some(validate::indian_mobile(&phone)?);
        }
        Ok(u)
    }

    fn is_empty(&self) -> bool {
        [
            &self.name,
            &self.qualification,
            &self.address,
            &self.aadhar,
            &self.pan,
            &self.phone,
            &self.email,
            &self.work_exp,
            &self.certificate,
            &self.other_doc,
        ]
        .iter()
        .all(|f| f.is_none())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AssignClientsRequest {
    pub user_ids: Vec<i64>,
    pub dietician_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientsQuery {
    pub dietician_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct DieticiansResponse {
    pub dietician: Vec<Dietician>,
}

#[derive(Debug, Serialize)]
pub struct DieticianOptionsResponse {
    pub dieticians: Vec<DieticianOption>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: String,
    pub dietician: Dietician,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UpdateResponse {
    pub message: String,
    pub dietician: Dietician,
}

#[derive(Debug, Serialize)]
pub struct AssignClientsResponse {
    pub message: String,
    pub updated: u64,
}

#[derive(Debug, Serialize)]
pub struct ClientList {
    pub user: Vec<User>,
}

#[derive(Debug, Serialize)]
pub struct ClientsResponse {
    pub clients: ClientList,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_form() -> Vec<(&'static str, &'static str)> {
        vec![
            ("username", "asha"),
            ("password", "secret1"),
            ("name", "Asha Rao"),
            ("qualification", "MSc Nutrition"),
            ("address", "Pune"),
            ("aadhar", "1234 5678 9012"),
            ("pan", "ABCDE1234F"),
            ("phone", "9876543210"),
            ("email", "Asha@Example.com"),
            ("work_exp", "5 years"),
            ("certificate", "RD"),
            ("other_doc", "none"),
        ]
    }

    #[test]
    fn registration_normalizes_phone_and_email() {
        let d = NewDietician::from_form(&MultipartForm::from_parts(&full_form())).unwrap();
        assert_eq!(d.phone, "+919876543210");
        assert_eq!(d.email, "asha@example.com");
    }

    #[test]
    fn registration_requires_every_field() {
        let fields: Vec<_> = full_form().into_iter().filter(|(k, _)| *k != "pan").collect();
        let err = NewDietician::from_form(&MultipartForm::from_parts(&fields)).unwrap_err();
        assert_eq!(err.to_string(), "Please fill in all required fields");
    }

    #[test]
    fn registration_checks_password_and_phone() {
        let mut fields = full_form();
        fields[1] = ("password", "abc");
        assert!(NewDietician::from_form(&MultipartForm::from_parts(&fields)).is_err());

        let mut fields = full_form();
        fields[7] = ("phone", "98765");
        let err = NewDietician::from_form(&MultipartForm::from_parts(&fields)).unwrap_err();
        assert_eq!(err.to_string(), "Phone number must be 10 digits");
    }

    #[test]
    fn update_needs_one_real_field() {
        let empty: UpdateDietician =
            serde_json::from_value(serde_json::json!({"name": "  ", "pan": null})).unwrap();
        assert_eq!(
            empty.validated().unwrap_err().to_string(),
            "Please update at least one field"
        );

        let u: UpdateDietician = serde_json::from_value(
            serde_json::json!({"work_exp": "6 years", "phone": "+91 98765 43210"}),
        )
        .unwrap();
        let u = u.validated().unwrap();
        assert_eq!(u.work_exp.as_deref(), Some("6 years"));
        assert_eq!(u.phone.as_deref(), Some("+919876543210"));
        assert_eq!(u.name, None);
    }
}
