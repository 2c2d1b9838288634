//! One-time-password delivery for `auth.otp.requested`.

use kadernim_domain::context::{AppInfo, OtpRequest, otp_context};
use kadernim_domain::error::{KadernimError, NotFoundError, ValidationError};
use kadernim_domain::event::{DomainEvent, names};
use kadernim_domain::template::TemplateChannel;

use crate::durable::{RunHandler, Steps};
use crate::ports::{EmailSender, StepJournal, TemplateRepository, UserDirectory};

/// The email provider accepted the request but reported a failure.
#[derive(Debug, thiserror::Error)]
#[error("OTP email was not delivered: {0}")]
pub struct OtpNotDelivered(pub String);

pub struct OtpService<T, U, E> {
    templates: T,
    users: U,
    email: E,
    app: AppInfo,
}

impl<T, U, E> OtpService<T, U, E>
where
    T: TemplateRepository,
    U: UserDirectory,
    E: EmailSender,
{
    pub fn new(templates: T, users: U, email: E, app: AppInfo) -> Self {
        Self {
            templates,
            users,
            email,
            app,
        }
    }

    /// Email the code in `event` to its requester.
    ///
    /// The requester does not need an account; a known user only adds a
    /// name to the context.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::MalformedPayload`] without `email` or `otp`
    /// - [`NotFoundError`] when no active OTP email template exists
    /// - a retryable delivery error when the provider refuses the email
    #[tracing::instrument(skip_all, fields(event_id = %event.id))]
    pub async fn deliver<J: StepJournal>(
        &self,
        event: &DomainEvent,
        steps: &Steps<'_, J>,
    ) -> Result<(), KadernimError> {
        let request = OtpRequest::from_payload(&event.data)
            .ok_or(ValidationError::MalformedPayload(names::OTP_REQUESTED))?;
        let template = self
            .templates
            .find_active(TemplateChannel::Email, names::OTP_REQUESTED)
            .await?
            .ok_or_else(|| NotFoundError {
                entity: "email template",
                id: names::OTP_REQUESTED.to_string(),
            })?;
        let user = self.users.find_by_email(&request.email).await?;
        let context = otp_context(&request, user.as_ref(), &self.app);

        steps
            .run("send-otp-email", || async {
                let report = self
                    .email
                    .send(&template.id.to_string(), &request.email, &context)
                    .await?;
                if !report.success {
                    let reason = report.error.unwrap_or_default();
                    return Err(KadernimError::Delivery(Box::new(OtpNotDelivered(reason))));
                }
                Ok::<_, KadernimError>(())
            })
            .await?;
        tracing::info!(known_user = user.is_some(), "otp email sent");
        Ok(())
    }
}

impl<T, U, E, J> RunHandler<J> for OtpService<T, U, E>
where
    T: TemplateRepository,
    U: UserDirectory,
    E: EmailSender,
    J: StepJournal,
{
    async fn handle(&self, event: &DomainEvent, steps: &Steps<'_, J>) -> Result<(), KadernimError> {
        self.deliver(event, steps).await
    }
}
