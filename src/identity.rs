//! Identity provider contract for the host platform's session token.

// self
use crate::_prelude::*;

/// Boxed future returned by [`IdentityProvider::mint_identity_token`].
pub type IdentityFuture<'a> =
	Pin<Box<dyn Future<Output = Result<String, IdentityError>> + 'a + Send>>;

/// Platform collaborator that mints identity tokens for the current session.
pub trait IdentityProvider
where
	Self: Send + Sync,
{
	/// Mints an identity token for the current session.
	fn mint_identity_token(&self) -> IdentityFuture<'_>;
}

/// Opaque identity provider failure.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Identity provider failed: {message}.")]
pub struct IdentityError {
	/// Human-readable error payload.
	pub message: String,
}
impl IdentityError {
	/// Creates an error from any displayable payload.
	pub fn new(message: impl Into<String>) -> Self {
		Self { message: message.into() }
	}
}

/// Adapts an async closure into an [`IdentityProvider`].
pub struct FnIdentityProvider<F>(F);
impl<F, Fut> FnIdentityProvider<F>
where
	F: Fn() -> Fut + Send + Sync,
	Fut: Future<Output = Result<String, IdentityError>> + Send + 'static,
{
	/// Wraps the closure.
	pub fn new(mint: F) -> Self {
		Self(mint)
	}
}
impl<F, Fut> IdentityProvider for FnIdentityProvider<F>
where
	F: Fn() -> Fut + Send + Sync,
	Fut: Future<Output = Result<String, IdentityError>> + Send + 'static,
{
	fn mint_identity_token(&self) -> IdentityFuture<'_> {
		Box::pin((self.0)())
	}
}
impl<F> Debug for FnIdentityProvider<F> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("FnIdentityProvider(..)")
	}
}
