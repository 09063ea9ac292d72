pub mod hakemus;
