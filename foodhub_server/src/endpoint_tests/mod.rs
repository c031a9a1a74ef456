mod helpers;
mod hmac;
mod mocks;
mod orders;
