pub mod http_prober;

#[cfg(test)]
pub mod transient_remote;
